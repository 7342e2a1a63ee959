//! Fan-out behavior of the broadcast hub.

use crate::*;

/// Every registered subscriber gets exactly one copy of each accepted frame.
#[tokio::test]
async fn telemetry_fans_out_to_every_subscriber() -> Result<()> {
    let relay = start().await?;
    let mut sub_a = connect_subscriber(&relay).await?;
    let mut sub_b = connect_subscriber(&relay).await?;

    let mut node = connect_authed_node(&relay, "n1").await?;
    let hello = hello_frame("n1", SECRET);
    assert_eq!(recv_text(&mut sub_a).await?, hello);
    assert_eq!(recv_text(&mut sub_b).await?, hello);

    let stats = stats_frame("n1", 5);
    node.send(Message::Text(stats.clone())).await?;
    assert_eq!(recv_text(&mut sub_a).await?, stats);
    assert_eq!(recv_text(&mut sub_b).await?, stats);
    Ok(())
}

/// With no subscribers the frame is dropped; a subscriber arriving later
/// does not retroactively receive it.
#[tokio::test]
async fn frames_without_subscribers_are_discarded() -> Result<()> {
    let relay = start().await?;
    let mut node = connect_authed_node(&relay, "n1").await?;
    node.send(Message::Text(stats_frame("n1", 9))).await?;
    settle().await;

    let mut late_subscriber = connect_subscriber(&relay).await?;
    assert_silent(&mut late_subscriber, Duration::from_millis(400)).await;
    Ok(())
}

/// A subscriber whose connection died is shed on write failure while the
/// remaining subscribers keep receiving every frame.
#[tokio::test]
async fn dead_subscriber_is_shed_and_others_keep_receiving() -> Result<()> {
    let relay = start().await?;
    let sub_dead = connect_subscriber(&relay).await?;
    let mut sub_live = connect_subscriber(&relay).await?;

    let mut node = connect_authed_node(&relay, "n1").await?;
    assert_eq!(recv_text(&mut sub_live).await?, hello_frame("n1", SECRET));

    drop(sub_dead);
    settle().await;

    // The first write after the disconnect may still land in the kernel
    // buffer; by the second the hub has shed the dead connection. The live
    // subscriber sees every frame either way.
    for peers in [1, 2, 3] {
        let stats = stats_frame("n1", peers);
        node.send(Message::Text(stats.clone())).await?;
        assert_eq!(recv_text(&mut sub_live).await?, stats);
    }
    Ok(())
}

/// Frames from concurrent nodes all reach the subscriber; each node's own
/// frames stay in send order.
#[tokio::test]
async fn frames_from_one_node_arrive_in_order() -> Result<()> {
    let relay = start().await?;
    let mut subscriber = connect_subscriber(&relay).await?;
    let mut node = connect_authed_node(&relay, "n1").await?;
    assert_eq!(recv_text(&mut subscriber).await?, hello_frame("n1", SECRET));

    for peers in 0..5 {
        node.send(Message::Text(stats_frame("n1", peers))).await?;
    }
    for peers in 0..5 {
        assert_eq!(recv_text(&mut subscriber).await?, stats_frame("n1", peers));
    }
    Ok(())
}
