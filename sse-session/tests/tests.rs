use log::LevelFilter;
use serde_json::json;
use sse_session::{SessionError, SessionOptions, SessionRegistry};
use std::time::Duration;

fn setup_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}

#[tokio::test]
async fn test_messages_reach_only_their_session() {
    setup_logger();

    let registry = SessionRegistry::new(SessionOptions::default());

    let (a, mut a_channels) = registry.create_transport("/message");
    a.attach_context("alice").unwrap();
    let a = registry.insert(a).unwrap();

    let (b, mut b_channels) = registry.create_transport("/message");
    b.attach_context("bob").unwrap();
    let b = registry.insert(b).unwrap();

    assert_ne!(a.session_id(), b.session_id());

    registry
        .get(a.session_id())
        .unwrap()
        .handle_post_message(json!({"for": "a"}))
        .unwrap();

    assert_eq!(a_channels.inbound.recv().await, Some(json!({"for": "a"})));
    let nothing = tokio::time::timeout(Duration::from_millis(50), b_channels.inbound.recv()).await;
    assert!(nothing.is_err(), "session b must not receive a's message");
    assert_eq!(registry.stats().routed_messages(), 1);
}

#[tokio::test]
async fn test_closed_session_is_not_routable() {
    setup_logger();

    let registry = SessionRegistry::new(SessionOptions::default());
    let (transport, _channels) = registry.create_transport("/message");
    transport.attach_context(()).unwrap();
    let transport = registry.insert(transport).unwrap();
    let session_id = transport.session_id().to_string();

    registry.remove(&session_id);
    registry.remove(&session_id);

    assert!(registry.get(&session_id).is_none());
    assert_eq!(
        transport.handle_post_message(json!({})),
        Err(SessionError::Closed(session_id))
    );
}

#[tokio::test]
async fn test_stream_task_ends_when_session_is_closed() {
    setup_logger();

    let registry = SessionRegistry::new(SessionOptions::default());
    let (transport, mut channels) = registry.create_transport("/message");
    transport.attach_context(()).unwrap();
    let transport = registry.insert(transport).unwrap();

    // Stand-in for the task that drains the outbound channel into the stream
    let guard = registry.guard(transport.session_id());
    let token = transport.shutdown_token();
    let stream_task = tokio::spawn(async move {
        let _guard = guard;
        let mut delivered = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                message = channels.outbound.recv() => match message {
                    Some(_) => delivered += 1,
                    None => break,
                },
            }
        }
        delivered
    });

    transport.send(json!({"n": 1})).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.remove(transport.session_id());

    let delivered = tokio::time::timeout(Duration::from_secs(1), stream_task)
        .await
        .expect("stream task did not stop")
        .unwrap();
    assert_eq!(delivered, 1);
    assert!(registry.is_empty());
    assert_eq!(registry.stats().closed(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_open_post_and_close() {
    setup_logger();

    let registry = SessionRegistry::<usize>::new(SessionOptions::default());
    let mut handles = vec![];

    for i in 0..32 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let (transport, mut channels) = registry.create_transport("/message");
            transport.attach_context(i).unwrap();
            let transport = registry.insert(transport).unwrap();
            let session_id = transport.session_id().to_string();

            let routed = registry.get(&session_id).unwrap();
            routed.handle_post_message(json!({ "n": i })).unwrap();
            let received = channels.inbound.recv().await;

            registry.remove(&session_id);
            (received, *routed.context().unwrap())
        }));
    }

    for handle in handles {
        let (received, owner) = handle.await.unwrap();
        assert_eq!(received, Some(json!({ "n": owner })));
    }

    assert!(registry.is_empty());
    assert_eq!(registry.stats().opened(), 32);
    assert_eq!(registry.stats().closed(), 32);
    assert_eq!(registry.stats().routed_messages(), 32);
}
