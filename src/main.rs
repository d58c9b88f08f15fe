//! Main entry point for the docker-manifest command

use docker_manifest_client::cli::{Args, Runner};
use docker_manifest_client::logging::init_tracing;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    init_tracing(args.verbose, args.quiet);

    let runner = Runner::new(args);
    match runner.run().await {
        Ok(0) => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
