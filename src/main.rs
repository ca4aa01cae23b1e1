#[actix_web::main]
async fn main() -> std::io::Result<()> {
    docmerge_server::run().await
}
