use std::time::Instant;

use couchdb_log_sink::config::CouchDbConfig;
use couchdb_log_sink::couchdb::{CouchDbSink, RAW_DEFAULT_LEVEL};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = CouchDbConfig::from_env();
    let sink = match CouchDbSink::connect(config).await {
        Ok(sink) => sink,
        Err(e) => {
            eprintln!("could not reach CouchDB: {e}");
            std::process::exit(1);
        }
    };

    let msg = "nyan ".repeat(53);
    let n: u32 = 1000;
    let start = Instant::now();

    for i in 0..n {
        if let Err(e) = sink.emit_raw(msg.as_str(), RAW_DEFAULT_LEVEL).await {
            eprintln!("emit failed on record {i}: {e}");
            std::process::exit(1);
        }
    }

    let elapsed = start.elapsed();
    println!(
        "sent {} records in {:?} (~{:.1} ms per record)",
        n,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / n as f64
    );
}
