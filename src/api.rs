use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm, MultipartFormConfig};
use actix_multipart::MultipartError;
use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::RequestContext;
use crate::config::Config;
use crate::db::Database;
use crate::error::{is_constraint_violation, AppError};
use crate::leaderboard::EXPLORE_LIMIT;
use crate::media;
use crate::models::{ContactMessage, NewReview, NewWebsite, Profile, ProfileUpdate, ReviewDraft, Website};
use crate::validation::{self, FieldError, ValidationErrors};

type ApiResult = Result<HttpResponse, AppError>;

const SELF_REVIEW: &str = "You cannot review your own project.";
const ALREADY_REVIEWED: &str = "You have already reviewed this project.";

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Extractor failures answer with the same JSON envelope as handler errors
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .app_data(MultipartFormConfig::default().error_handler(multipart_error));

    cfg.route("/", web::get().to(home))
        .service(
            web::scope("/dashboard")
                .route("/overview/", web::get().to(dashboard))
                .route("/my-posts/", web::get().to(my_posts))
                .route("/my-reviews/", web::get().to(my_reviews))
                .route("/favorites/", web::get().to(favorites))
                .route("/explore/", web::get().to(explore))
                .route("/details/{id}", web::get().to(my_post_detail))
                .route("/website/{id}", web::get().to(website_detail))
                .route("/submit-website/", web::post().to(submit_website))
                .route("/toggle-favorite/", web::post().to(toggle_favorite))
                .route("/reviews/{id}/", web::put().to(edit_review))
                .route("/{id}/add-review/", web::post().to(add_review)),
        )
        .service(
            web::resource("/profile/{username}/")
                .route(web::get().to(get_profile))
                .route(web::post().to(edit_profile)),
        )
        .route("/contact_us/", web::post().to(contact_us))
        // Read-only listings
        .service(
            web::scope("/api")
                .route("/projects/", web::get().to(list_projects))
                .route("/profiles/", web::get().to(list_profiles)),
        );
}

fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!("[API] Rejected JSON body on {}: {}", req.path(), err);
    AppError::MalformedPayload("Invalid JSON body").into()
}

fn query_error(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    debug!("[API] Rejected query on {}: {}", req.path(), err);
    AppError::MalformedPayload("Invalid query string").into()
}

fn path_error(err: PathError, req: &HttpRequest) -> actix_web::Error {
    debug!("[API] Unmatched path parameter on {}: {}", req.path(), err);
    AppError::NotFound("Resource not found").into()
}

fn multipart_error(err: MultipartError, req: &HttpRequest) -> actix_web::Error {
    debug!("[API] Rejected upload on {}: {}", req.path(), err);
    AppError::MalformedPayload("Invalid upload form").into()
}

fn media_url(file: &str) -> String {
    format!("/media/{file}")
}

pub async fn home(db: web::Data<Database>) -> ApiResult {
    let today = Utc::now().date_naive();

    let mut body = match db.highest_rated_review().await? {
        Some(top) => {
            let alt_name = if top.website.title.is_empty() {
                "Website Image"
            } else {
                top.website.title.as_str()
            };
            json!({
                "title": "FINEST",
                "website_id": top.website.id,
                "website_title": top.website.title,
                "website_image": media_url(&top.website.file),
                "website_description": top.website.description,
                "review_score": top.review.average,
                "formatted_date": top.formatted_date(),
                "alt_name": alt_name,
                "user_username": top.owner.username,
                "user_profile_url": format!("/profile/{}/", top.owner.username),
                "user_avatar_url": top.owner.avatar_url(),
            })
        }
        None => json!({
            "title": "Project Reviews Application",
            "message": "No reviews available yet",
        }),
    };

    let recent_sites = db.recent_sites_of_the_day(today).await?;
    body["recent_sites"] = json!(recent_sites);
    Ok(HttpResponse::Ok().json(body))
}

pub async fn dashboard(db: web::Data<Database>, ctx: RequestContext) -> ApiResult {
    let report = db.dashboard(&ctx.user, Utc::now().naive_utc()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "title": "USER DASHBOARD",
        "dashboard": report,
    })))
}

pub async fn my_posts(db: web::Data<Database>, ctx: RequestContext) -> ApiResult {
    let posts = db.websites_with_overall(ctx.user_id(), false).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "MY POSTS", "user_posts": posts })))
}

pub async fn favorites(db: web::Data<Database>, ctx: RequestContext) -> ApiResult {
    let favorites = db.websites_with_overall(ctx.user_id(), true).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "FAVORITES", "favorites": favorites })))
}

pub async fn my_reviews(db: web::Data<Database>, ctx: RequestContext) -> ApiResult {
    let reviews = db.reviews_by_user(ctx.user_id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "My Reviews", "reviews": reviews })))
}

pub async fn explore(db: web::Data<Database>, _ctx: RequestContext) -> ApiResult {
    let boards = db.explore(EXPLORE_LIMIT).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "EXPLORE", "explore": boards })))
}

async fn find_website(db: &Database, website_id: i64) -> Result<Website, AppError> {
    db.get_website(website_id)
        .await?
        .ok_or(AppError::NotFound("Website not found"))
}

/// Detail of one of the caller's own websites.
pub async fn my_post_detail(db: web::Data<Database>, ctx: RequestContext, path: web::Path<i64>) -> ApiResult {
    let website = find_website(&db, path.into_inner()).await?;
    if website.user_id != ctx.user_id() {
        return Err(AppError::NotFound("Website not found"));
    }
    let detail = db.website_detail(website, &ctx.user).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "WEBSITE DETAILS", "detail": detail })))
}

pub async fn website_detail(db: web::Data<Database>, ctx: RequestContext, path: web::Path<i64>) -> ApiResult {
    let website = find_website(&db, path.into_inner()).await?;
    let detail = db.website_detail(website, &ctx.user).await?;
    Ok(HttpResponse::Ok().json(json!({ "title": "WEBSITE DETAILS", "detail": detail })))
}

#[derive(MultipartForm)]
pub struct SubmitWebsiteForm {
    pub title: Text<String>,
    pub url: Text<String>,
    pub description: Text<String>,
    pub file: TempFile,
}

pub async fn submit_website(
    db: web::Data<Database>,
    config: web::Data<Config>,
    ctx: RequestContext,
    MultipartForm(form): MultipartForm<SubmitWebsiteForm>,
) -> ApiResult {
    let title = form.title.into_inner();
    let url = form.url.into_inner();
    let description = form.description.into_inner();

    let mut errors = ValidationErrors::default();
    if let Err(e) = validation::validate_submission(&title, &url, &description) {
        errors.merge(e);
    }
    let file_name = form.file.file_name.clone().unwrap_or_default();
    if file_name.is_empty() {
        errors.push(FieldError::new("file", "This field is required."));
    } else if let Err(e) = validation::validate_thumbnail(&file_name, form.file.size) {
        errors.merge(e);
    }
    errors.into_result()?;

    let media_root = config.media_root.clone();
    let temp = form.file.file;
    let stored = web::block(move || media::store_thumbnail(&media_root, &file_name, temp.path())).await??;

    let new_website = NewWebsite {
        title: title.trim().to_string(),
        url: url.trim().to_string(),
        description: Some(description.trim().to_string()),
        file: stored,
    };
    let website = match db.insert_website(ctx.user_id(), &new_website).await {
        Ok(website) => website,
        Err(e) => {
            let orphan = config.media_root.join(&new_website.file);
            if let Err(io) = web::block(move || std::fs::remove_file(orphan)).await? {
                warn!("[API] Could not remove orphaned thumbnail {}: {}", new_website.file, io);
            }
            return Err(e.into());
        }
    };
    info!("[API] User {} submitted website {}", ctx.user.username, website.id);

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Your website was submitted successfully.",
        "website": website,
    })))
}

fn parse_draft(body: &[u8]) -> Result<ReviewDraft, AppError> {
    serde_json::from_slice(body).map_err(|_| AppError::MalformedPayload("Invalid review payload"))
}

/// Adds a review to someone else's website. Ownership and duplicates are
/// checked before the body is even parsed.
pub async fn add_review(
    db: web::Data<Database>,
    ctx: RequestContext,
    path: web::Path<i64>,
    body: web::Bytes,
) -> ApiResult {
    let website = find_website(&db, path.into_inner()).await?;

    if website.user_id == ctx.user_id() {
        info!("[API] User {} tried to review own website {}", ctx.user.username, website.id);
        return Err(AppError::Forbidden(SELF_REVIEW));
    }
    if db.has_reviewed(website.id, ctx.user_id()).await? {
        return Err(AppError::Duplicate(ALREADY_REVIEWED));
    }

    let draft = parse_draft(&body)?;
    let new_review = NewReview::from_draft(website.id, ctx.user_id(), draft)?;
    let review = db.insert_review(&new_review).await.map_err(|e| {
        if is_constraint_violation(&e) {
            AppError::Duplicate(ALREADY_REVIEWED)
        } else {
            AppError::Database(e)
        }
    })?;
    info!("[API] Review {} added to website {} (average {})", review.id, website.id, review.average);

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Your review has been added successfully.",
        "review": review,
    })))
}

pub async fn edit_review(
    db: web::Data<Database>,
    ctx: RequestContext,
    path: web::Path<i64>,
    body: web::Bytes,
) -> ApiResult {
    let review_id = path.into_inner();
    let existing = db
        .get_review(review_id)
        .await?
        .ok_or(AppError::NotFound("Review not found"))?;
    if existing.user_id != ctx.user_id() {
        return Err(AppError::Forbidden("You are not authorized to edit this review."));
    }

    let draft = parse_draft(&body)?;
    let scores = draft.scores()?;
    let review = db
        .update_review(review_id, scores, draft.description)
        .await?
        .ok_or(AppError::NotFound("Review not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Your review has been updated successfully.",
        "review": review,
    })))
}

#[derive(Deserialize)]
struct FavoriteToggle {
    website_id: Option<i64>,
}

pub async fn toggle_favorite(db: web::Data<Database>, _ctx: RequestContext, body: web::Bytes) -> ApiResult {
    let payload: FavoriteToggle =
        serde_json::from_slice(&body).map_err(|_| AppError::MalformedPayload("Invalid JSON body"))?;
    let website_id = payload
        .website_id
        .filter(|id| *id > 0)
        .ok_or(AppError::MalformedPayload("Missing website ID"))?;

    let is_favorite = db
        .toggle_favorite(website_id)
        .await?
        .ok_or(AppError::NotFound("Website not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "is_favorite": is_favorite })))
}

async fn own_profile_user(db: &Database, ctx: &RequestContext, username: &str) -> Result<i64, AppError> {
    let user = db
        .get_user_by_username(username)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;
    if user.id != ctx.user_id() {
        return Err(AppError::Forbidden("You are not authorized to edit this profile."));
    }
    Ok(user.id)
}

pub async fn get_profile(db: web::Data<Database>, ctx: RequestContext, path: web::Path<String>) -> ApiResult {
    let username = path.into_inner();
    let user_id = own_profile_user(&db, &ctx, &username).await?;
    let profile = db.get_or_create_profile(user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "title": format!("Edit Profile - {username}"),
        "profile": profile,
    })))
}

pub async fn edit_profile(
    db: web::Data<Database>,
    ctx: RequestContext,
    path: web::Path<String>,
    update: web::Json<ProfileUpdate>,
) -> ApiResult {
    let user_id = own_profile_user(&db, &ctx, &path.into_inner()).await?;
    let update = update.into_inner();
    validation::validate_profile(&update)?;

    let profile = db.update_profile(user_id, &update).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile updated successfully.",
        "profile": profile,
    })))
}

pub async fn contact_us(db: web::Data<Database>, message: web::Json<ContactMessage>) -> ApiResult {
    let message = message.into_inner();
    validation::validate_contact(&message)?;
    let id = db.insert_contact(&message).await?;
    info!("[API] Contact message {} received", id);
    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Thank you for contacting us.",
    })))
}

#[derive(Deserialize)]
pub struct ProjectFilter {
    pub user: Option<i64>,
    pub is_favorite: Option<bool>,
}

pub async fn list_projects(db: web::Data<Database>, filter: web::Query<ProjectFilter>) -> ApiResult {
    let projects = db.list_websites(filter.user, filter.is_favorite).await?;
    Ok(HttpResponse::Ok().json(projects))
}

#[derive(Deserialize)]
pub struct ProfileFilter {
    pub user: Option<i64>,
}

#[derive(Serialize)]
struct ProfileWithProjects {
    #[serde(flatten)]
    profile: Profile,
    projects: Vec<Website>,
}

pub async fn list_profiles(db: web::Data<Database>, filter: web::Query<ProfileFilter>) -> ApiResult {
    let mut listed = Vec::new();
    for profile in db.list_profiles(filter.user).await? {
        let projects = db.list_websites(Some(profile.user_id), None).await?;
        listed.push(ProfileWithProjects { profile, projects });
    }
    Ok(HttpResponse::Ok().json(listed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::create_test_db;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};

    const BOUNDARY: &str = "thumb-boundary";

    fn upload_body() -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in [("title", "Site"), ("url", "https://site.example"), ("description", "d")] {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"shot.png\"\r\n\r\npng\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );
        body
    }

    #[actix_web::test]
    async fn failed_insert_removes_stored_thumbnail() {
        let db = create_test_db().await;
        db.lock()
            .await
            .execute_batch(
                "CREATE TRIGGER reject_websites BEFORE INSERT ON websites
                 BEGIN SELECT RAISE(ABORT, 'websites are read-only'); END;",
            )
            .unwrap();

        let media_root = std::env::temp_dir().join(format!("finest-orphan-{}", uuid::Uuid::new_v4()));
        let config = Config {
            media_root: media_root.clone(),
            ..Config::default()
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(config))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/dashboard/submit-website/")
            .insert_header(("X-Remote-User", "maker"))
            .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}")))
            .set_payload(upload_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let uploads = media_root.join(media::WEBSITE_UPLOAD_DIR);
        assert_eq!(std::fs::read_dir(&uploads).unwrap().count(), 0);
        std::fs::remove_dir_all(&media_root).ok();
    }
}
