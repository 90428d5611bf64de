//! End-to-end routing through an assembled pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;

use syncroute::event::{ChannelEvent, SocketEvent};
use syncroute::outgoing::{click_stream, ElementData, INCOMING_CLICK, OUTGOING_CLICK};
use syncroute::pipeline::{
    Inputs, OptionStore, Pipeline, PipelineConfig, PipelineSources, SocketHandle,
};
use syncroute::registry::handler::{many, none, once};
use syncroute::registry::{constant, HandlerResult, Registry, RegistryFeed};
use syncroute::Channel;

const WAIT: Duration = Duration::from_secs(2);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn transport() -> (SocketHandle, mpsc::UnboundedReceiver<SocketEvent>, Inputs) {
    let (socket, outbound) = SocketHandle::new(64);
    let inputs = Inputs::new(socket.clone(), OptionStore::default());
    (socket, outbound, inputs)
}

async fn recv(rx: &mut broadcast::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for stage output")
        .expect("stage output closed")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn socket_event_routes_to_effect() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let socket_handlers = Registry::new(Channel::Socket).on("hello", |payload, _| {
        once(ChannelEvent::effect("notify", payload.clone()))
    });
    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new().socket_handlers(constant(socket_handlers)),
        PipelineConfig::default(),
    );
    let mut output = pipeline.subscribe(Channel::Socket);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("hello", json!({"msg": "hi"})));

    let event = recv(&mut output).await;
    assert_eq!(event, ChannelEvent::effect("notify", json!({"msg": "hi"})));

    eventually(|| running.stats(Channel::Socket).dispatched == 1).await;
    assert!(output.try_recv().is_err());
    running.stop().await.unwrap();
}

#[tokio::test]
async fn unknown_socket_event_is_dropped() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let socket_handlers = Registry::new(Channel::Socket).on("hello", |payload, _| {
        once(ChannelEvent::effect("notify", payload.clone()))
    });
    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new().socket_handlers(constant(socket_handlers)),
        PipelineConfig::default(),
    );
    let mut output = pipeline.subscribe(Channel::Socket);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("unknown", json!({})));

    eventually(|| running.stats(Channel::Socket).unmatched == 1).await;
    assert!(output.try_recv().is_err());
    running.stop().await.unwrap();
}

#[tokio::test]
async fn scroll_restore_handler_overrides_output_handler() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let socket_handlers = Registry::new(Channel::Socket)
        .on("go", |_, _| once(ChannelEvent::effect("a", json!(null))));
    let output_handlers = Registry::new(Channel::Effect)
        .on("a", |_, _| once(ChannelEvent::log("resolved", json!("f1"))));
    let scroll_handlers = Registry::new(Channel::Effect)
        .on("a", |_, _| once(ChannelEvent::log("resolved", json!("f2"))));

    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new()
            .socket_handlers(constant(socket_handlers))
            .output_handlers(constant(output_handlers))
            .scroll_restore_handlers(constant(scroll_handlers)),
        PipelineConfig::default(),
    );
    let mut effect = pipeline.subscribe(Channel::Effect);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("go", json!(null)));

    assert_eq!(*recv(&mut effect).await.payload, json!("f2"));
    running.stop().await.unwrap();
}

#[tokio::test]
async fn same_key_order_preserved_through_stages() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let socket_handlers = Registry::new(Channel::Socket)
        .on("scroll", |payload, _| once(ChannelEvent::effect("scroll", payload.clone())));
    let output_handlers = Registry::new(Channel::Effect)
        .on("scroll", |payload, _| once(ChannelEvent::dom("scroll", payload.clone())));
    let dom_handlers = Registry::new(Channel::DomEffect).on("scroll", move |payload, _| {
        recorder.lock().unwrap().push(payload.clone());
        none()
    });

    let running = Pipeline::new(
        inputs,
        PipelineSources::new()
            .socket_handlers(constant(socket_handlers))
            .output_handlers(constant(output_handlers))
            .dom_handlers(constant(dom_handlers)),
        PipelineConfig::default(),
    )
    .start();

    for y in 1..=10 {
        socket.deliver(SocketEvent::new("scroll", json!(y)));
    }

    eventually(|| seen.lock().unwrap().len() == 10).await;
    let expected: Vec<Value> = (1..=10).map(|y| json!(y)).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn throwing_handler_does_not_starve_stage() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let socket_handlers = Registry::new(Channel::Socket)
        .on("bad", |_, _| once(ChannelEvent::effect("boom", json!(null))))
        .on("good", |payload, _| once(ChannelEvent::effect("ok", payload.clone())));
    let output_handlers = Registry::new(Channel::Effect)
        .on("boom", |_, _| -> HandlerResult { panic!("effect handler exploded") })
        .on("ok", |payload, _| once(ChannelEvent::dom("flash", payload.clone())));

    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new()
            .socket_handlers(constant(socket_handlers))
            .output_handlers(constant(output_handlers)),
        PipelineConfig::default(),
    );
    let mut effect = pipeline.subscribe(Channel::Effect);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("bad", json!(null)));
    socket.deliver(SocketEvent::new("good", json!("still routing")));

    assert_eq!(*recv(&mut effect).await.payload, json!("still routing"));
    eventually(|| running.stats(Channel::Effect).faults == 1).await;
    assert!(running.is_running());
    running.stop().await.unwrap();
}

#[tokio::test]
async fn log_stage_sees_every_stage() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let logged = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&logged);

    let socket_handlers = Registry::new(Channel::Socket).on("connection", |_, _| {
        many([
            ChannelEvent::log("info", json!("from socket")),
            ChannelEvent::effect("notify", json!("Connected")),
        ])
    });
    let output_handlers = Registry::new(Channel::Effect).on("notify", |payload, _| {
        once(ChannelEvent::dom("flash", payload.clone()))
    });
    let dom_handlers = Registry::new(Channel::DomEffect)
        .on("flash", |_, _| once(ChannelEvent::log("info", json!("from dom"))));
    let log_handlers = Registry::new(Channel::Log).on("info", move |payload, _| {
        sink.lock().unwrap().push(payload.clone());
        none()
    });

    let running = Pipeline::new(
        inputs,
        PipelineSources::new()
            .socket_handlers(constant(socket_handlers))
            .output_handlers(constant(output_handlers))
            .dom_handlers(constant(dom_handlers))
            .log_handlers(constant(log_handlers)),
        PipelineConfig::default(),
    )
    .start();

    socket.deliver(SocketEvent::new("connection", json!({})));

    eventually(|| logged.lock().unwrap().len() == 2).await;
    let mut logged = logged.lock().unwrap().clone();
    logged.sort_by_key(|v| v.to_string());
    assert_eq!(logged, vec![json!("from dom"), json!("from socket")]);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn fan_out_does_not_repeat_handlers() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let socket_handlers = Registry::new(Channel::Socket).on("hello", move |payload, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        once(ChannelEvent::effect("notify", payload.clone()))
    });

    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new().socket_handlers(constant(socket_handlers)),
        PipelineConfig::default(),
    );
    // Effect and log stages are linked to this output as well
    let mut first = pipeline.subscribe(Channel::Socket);
    let mut second = pipeline.subscribe(Channel::Socket);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("hello", json!(1)));

    recv(&mut first).await;
    recv(&mut second).await;
    eventually(|| running.stats(Channel::Effect).received == 1).await;
    eventually(|| running.stats(Channel::Log).received == 1).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn outgoing_click_reaches_transport() {
    init_tracing();
    let (socket, mut outbound, inputs) = transport();
    let (clicks, rx) = mpsc::unbounded_channel();
    let outgoing = click_stream(
        UnboundedReceiverStream::new(rx),
        socket.subscribe(),
        Duration::from_secs(1),
    );
    let socket_handlers = Registry::new(Channel::Socket).on(OUTGOING_CLICK, |payload, inputs| {
        inputs.socket.emit(INCOMING_CLICK, payload.clone());
        none()
    });

    let running = Pipeline::new(
        inputs,
        PipelineSources::new()
            .outgoing(outgoing)
            .socket_handlers(constant(socket_handlers)),
        PipelineConfig::default(),
    )
    .start();

    clicks.send(ElementData::new("A", 2)).unwrap();

    let sent = tokio::time::timeout(WAIT, outbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.name, INCOMING_CLICK);
    assert_eq!(sent.payload, json!({"tagName": "A", "index": 2}));
    running.stop().await.unwrap();
}

#[tokio::test]
async fn handler_swap_applies_to_later_events() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let (feed, socket_handlers) = RegistryFeed::new(Registry::new(Channel::Socket));

    let pipeline = Pipeline::new(
        inputs,
        PipelineSources::new().socket_handlers(socket_handlers),
        PipelineConfig::default(),
    );
    let mut output = pipeline.subscribe(Channel::Socket);
    let running = pipeline.start();

    socket.deliver(SocketEvent::new("hello", json!(1)));
    eventually(|| running.stats(Channel::Socket).unmatched == 1).await;

    feed.publish(Registry::new(Channel::Socket).on("hello", |payload, _| {
        once(ChannelEvent::effect("notify", payload.clone()))
    }));
    // Registry updates win ties with events, but give the router a turn
    tokio::time::sleep(Duration::from_millis(20)).await;
    socket.deliver(SocketEvent::new("hello", json!(2)));

    assert_eq!(*recv(&mut output).await.payload, json!(2));
    running.stop().await.unwrap();
}

#[tokio::test]
async fn run_until_stops_on_shutdown() {
    init_tracing();
    let (_socket, _outbound, inputs) = transport();
    let running = Pipeline::new(inputs, PipelineSources::new(), PipelineConfig::default()).start();
    assert!(running.is_running());

    let result = tokio::time::timeout(
        WAIT,
        running.run_until(tokio::time::sleep(Duration::from_millis(10))),
    )
    .await
    .expect("pipeline did not stop");

    assert!(result.is_ok());
}

#[tokio::test]
async fn burst_larger_than_capacity_reaches_next_stage() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let socket_handlers = Registry::new(Channel::Socket).on("burst", |_, _| {
        many((0..2000).map(|i| ChannelEvent::effect("tick", json!(i))))
    });
    let output_handlers = Registry::new(Channel::Effect).on("tick", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        none()
    });

    let running = Pipeline::new(
        inputs,
        PipelineSources::new()
            .socket_handlers(constant(socket_handlers))
            .output_handlers(constant(output_handlers)),
        PipelineConfig::default(),
    )
    .start();

    socket.deliver(SocketEvent::new("burst", json!(null)));

    eventually(|| calls.load(Ordering::SeqCst) == 2000).await;
    assert_eq!(running.stats(Channel::Socket).emitted, 2000);
    eventually(|| running.stats(Channel::Log).received == 2000).await;
    running.stop().await.unwrap();
}

#[tokio::test]
async fn incoming_burst_is_not_dropped() {
    init_tracing();
    let (socket, _outbound, inputs) = transport();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let socket_handlers = Registry::new(Channel::Socket).on("tick", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        none()
    });

    let running = Pipeline::new(
        inputs,
        PipelineSources::new().socket_handlers(constant(socket_handlers)),
        PipelineConfig::default(),
    )
    .start();

    // Well past the transport's broadcast capacity of 64
    for i in 0..500 {
        socket.deliver(SocketEvent::new("tick", json!(i)));
    }

    eventually(|| calls.load(Ordering::SeqCst) == 500).await;
    running.stop().await.unwrap();
}
