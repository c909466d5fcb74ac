//! HTTP API binary exposing transfer verification and the monitoring
//! lifecycle. The watchdog runs in-process so the query surface reads the
//! same store the subscription loops write.

mod application;
mod handlers;
mod state;


use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(err) = application::run().await {
        eprintln!("[api] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}
