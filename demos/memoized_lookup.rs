//! Resolve a handful of hostnames from several concurrent tasks, sharing one
//! lookup per host, then pair the answers up round by round.
//!
//! Run with `RUST_LOG=trace cargo run --example memoized_lookup` to watch the
//! cache at work.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures_functools::cache::{CacheKey, Capacity, Memoize};
use futures_functools::prelude::*;
use futures_lite::{stream, StreamExt};

/// Pretend to ask a name server. Slow on purpose.
async fn resolve(host: String) -> Result<IpAddr, String> {
    log::info!("resolving {host}");
    tokio::time::sleep(Duration::from_millis(100)).await;
    match host.as_str() {
        "localhost" => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        "example.org" => Ok(IpAddr::V4(Ipv4Addr::new(93, 184, 215, 14))),
        "rust-lang.org" => Ok(IpAddr::V4(Ipv4Addr::new(13, 35, 1, 1))),
        _ => Err(format!("no such host: {host}")),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let lookup = Arc::new(Memoize::new(
        Capacity::new(32),
        |host: &String| CacheKey::builder().arg(host.as_str()).build(),
        resolve,
    ));

    let hosts = ["example.org", "localhost", "example.org", "nope.invalid", "localhost"];
    let tasks = hosts.iter().map(|host| {
        let lookup = lookup.clone();
        let host = host.to_string();
        tokio::spawn(async move {
            let handle = lookup.call(host.clone()).expect("hostnames are hashable");
            (host, handle.await)
        })
    });

    let answers: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|task| task.expect("lookup task panicked"))
        .collect();
    for (host, answer) in &answers {
        match answer {
            Ok(addr) => println!("{host:>14} -> {addr}"),
            Err(err) => println!("{host:>14} !! {err}"),
        }
    }
    println!("{:?}", lookup.cache().info());

    // Number the hosts which resolved, one round at a time.
    let ranks = stream::iter(1..);
    let names = stream::iter(
        answers
            .iter()
            .filter(|(_, answer)| answer.is_ok())
            .map(|(host, _)| host.as_str()),
    );
    let ranked: Vec<_> = (ranks, names).round_robin().collect().await;
    println!("{ranked:?}");
}
