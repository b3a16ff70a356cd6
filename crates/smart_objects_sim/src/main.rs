#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    lib_smart_objects_sim::init().await
}
