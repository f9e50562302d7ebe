use std::collections::HashMap;

use helm_s3_proxy::{Config, start_app};

fn main() {
    let vars: HashMap<String, String> = std::env::vars().collect();
    let config = Config::from_env(&vars);

    // Drop ENV hashmap to free memory before we start the server.
    drop(vars);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.worker_threads)
        .thread_stack_size(2 << 20) // 2 MiB
        .build()
        .expect("can't start tokio runtime");

    if let Err(error) = runtime.block_on(start_app(config)) {
        eprintln!("Application error: {error:?}");
        std::process::exit(1);
    }
}
