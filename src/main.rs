//! docker-papa entry point

use docker_papa::cli::{Args, Runner};
use std::process;

#[tokio::main]
async fn main() {
    let runner = Runner::new(Args::parse_args());

    match runner.run().await {
        Ok(digest) => println!("{}", digest),
        Err(e) => {
            runner.logger().error(&e.to_string());
            process::exit(1);
        }
    }
}
