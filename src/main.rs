use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;

use finest::api;
use finest::config::Config;
use finest::db::Database;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    // Load configuration
    let config = Config::load();

    // Initialize the database
    let db = Database::new(&config.database_path).map_err(std::io::Error::other)?;
    db.create_schema().await.map_err(std::io::Error::other)?; // Ensure the schema is created
    info!("Schema ready at {}", config.database_path);

    std::fs::create_dir_all(&config.media_root)?;

    let addr = config.bind_addr.clone();
    let db = web::Data::new(db);
    let config = web::Data::new(config);
    info!("listening on http://{}", &addr);

    // Start the Actix Web server
    HttpServer::new(move || {
        let media_root = config.media_root.clone();

        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(config.clone())
            .configure(api::configure)
            // Serve uploaded thumbnails
            .service(Files::new("/media", media_root))
    })
    .bind(&addr)?
    .run()
    .await
}
