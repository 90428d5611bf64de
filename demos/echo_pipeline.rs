//! Echo pipeline - routes a scripted socket session through every stage
//!
//! Run with: cargo run --example echo_pipeline
//!
//! This example demonstrates:
//! - Building handler registries for all four stages
//! - Swapping the socket registry at runtime with `RegistryFeed`
//! - Reading events bound for the server from the outbound queue
//! - Shutting the pipeline down with `run_until`
//!
//! # Architecture
//!
//! ```text
//!   script ──deliver──► [socket] ──► [effect] ──► [dom-effect]
//!                          │             │              │
//!                          │             └─ notify ──► notification queue
//!                          │
//!                          └─ emit ──► outbound queue ──► printed as wire bytes
//! ```

use std::time::Duration;

use serde_json::{json, Value};

use syncroute::event::{ChannelEvent, SocketEvent, WireEvent};
use syncroute::pipeline::{
    Inputs, NotifyHandle, OptionStore, Pipeline, PipelineConfig, PipelineSources, SocketHandle,
};
use syncroute::registry::handler::{many, none, once};
use syncroute::registry::{constant, Registry, RegistryFeed};
use syncroute::Channel;

fn socket_handlers(greeting: &'static str) -> Registry {
    Registry::new(Channel::Socket)
        .on("connection", move |payload, _| {
            many([
                ChannelEvent::effect("notify", json!(greeting)),
                ChannelEvent::log("info", payload.clone()),
            ])
        })
        .on("browser:scroll", |payload, _| {
            once(ChannelEvent::dom("scroll", payload.clone()))
        })
        .on("echo", |payload, inputs| {
            inputs.socket.emit("echo:reply", payload.clone());
            none()
        })
}

fn effect_handlers() -> Registry {
    Registry::new(Channel::Effect).on("notify", |payload, inputs| {
        let message = payload.as_str().unwrap_or("Connected").to_string();
        let timeout = Duration::from_millis(inputs.options.get().reload_delay.max(500));
        inputs.notify.flash(message.clone(), timeout);
        once(ChannelEvent::dom("flash", Value::String(message)))
    })
}

fn dom_handlers() -> Registry {
    Registry::new(Channel::DomEffect)
        .on("scroll", |payload, _| {
            once(ChannelEvent::log("debug", json!({"scrolledTo": payload})))
        })
        .on("flash", |payload, _| {
            once(ChannelEvent::log("info", json!({"flashed": payload})))
        })
}

fn log_handlers() -> Registry {
    Registry::new(Channel::Log)
        .on("info", |payload, inputs| {
            tracing::info!(prefix = %inputs.options.get().log_prefix, "{}", payload);
            none()
        })
        .on("debug", |payload, inputs| {
            tracing::debug!(prefix = %inputs.options.get().log_prefix, "{}", payload);
            none()
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncroute=debug".parse()?)
                .add_directive("echo_pipeline=debug".parse()?),
        )
        .init();

    let (socket, mut outbound) = SocketHandle::new(64);
    let (notify, mut notifications) = NotifyHandle::new();
    let inputs = Inputs::new(socket.clone(), OptionStore::default()).with_notify(notify);

    let (feed, socket_registries) = RegistryFeed::new(socket_handlers("Connected"));
    let sources = PipelineSources::new()
        .socket_handlers(socket_registries)
        .output_handlers(constant(effect_handlers()))
        .dom_handlers(constant(dom_handlers()))
        .log_handlers(constant(log_handlers()));

    let running = Pipeline::new(inputs, sources, PipelineConfig::default()).start();

    // The "server" side: print whatever handlers send back
    tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let wire = WireEvent::from(event);
            println!("-> server: {}", String::from_utf8_lossy(&wire.to_bytes()));
        }
    });

    tokio::spawn(async move {
        while let Some(note) = notifications.recv().await {
            println!("[notify] {} ({:?})", note.message, note.timeout);
        }
    });

    socket.deliver(SocketEvent::new("connection", json!({"session": 1})));
    for y in [120, 480, 960] {
        socket.deliver(SocketEvent::new("browser:scroll", json!(y)));
    }
    socket.deliver(SocketEvent::new("echo", json!({"ping": 1})));

    tokio::time::sleep(Duration::from_millis(100)).await;
    feed.publish(socket_handlers("Reconnected"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    socket.deliver(SocketEvent::new("connection", json!({"session": 2})));

    let shutdown = async {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    };
    running.run_until(shutdown).await?;

    println!("Done");
    Ok(())
}
