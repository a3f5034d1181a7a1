//! Websocket implementation of [`ChangeFeed`].
//!
//! One connection carries every subscription. Frames are JSON:
//! `{ "topic": "<table>:<meetingId>", "event": "...", "payload": { "record": <row> } }`
//! with `subscribe`/`leave` sent by this side and `INSERT`/`UPDATE`/`DELETE`
//! arriving from the backend. There is no reconnect logic: when the
//! connection drops, every open subscription ends (`next()` returns `None`).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::model::{Meeting, Note};

use super::feed::{
    ChangeEvent, ChangeFeed, ChangeKind, ChangePayload, EventFilter, Subscription, Table,
};
use super::store::StoreError;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

impl Frame {
    fn control(topic: &str, event: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload: Value::Null,
        }
    }
}

struct Listener {
    table: Table,
    meeting_id: String,
    filter: EventFilter,
    tx: mpsc::Sender<ChangeEvent>,
}

pub struct RealtimeFeed {
    listeners: Arc<Mutex<HashMap<u64, Listener>>>,
    next_id: AtomicU64,
    outbound: mpsc::Sender<Message>,
    tasks: Vec<JoinHandle<()>>,
}

impl RealtimeFeed {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| StoreError::Feed(e.to_string()))?;
        info!("Realtime feed connected to {}", url);

        let (mut ws_tx, mut ws_rx) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(32);
        let listeners: Arc<Mutex<HashMap<u64, Listener>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if ws_tx.send(message).await.is_err() {
                    break;
                }
            }
        });

        let reader_listeners = listeners.clone();
        let reader_outbound = outbound.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_rx.next().await {
                match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                        Ok(frame) => dispatch(&reader_listeners, frame),
                        Err(err) => debug!("Ignoring unparseable feed frame: {}", err),
                    },
                    Ok(Message::Ping(payload)) => {
                        let _ = reader_outbound.try_send(Message::Pong(payload));
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("Realtime connection error: {}", err);
                        break;
                    }
                }
            }
            // Dropping the senders ends every open subscription.
            reader_listeners.lock().unwrap().clear();
            warn!("Realtime feed disconnected");
        });

        Ok(Self {
            listeners,
            next_id: AtomicU64::new(1),
            outbound,
            tasks: vec![writer, reader],
        })
    }
}

impl Drop for RealtimeFeed {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn dispatch(listeners: &Mutex<HashMap<u64, Listener>>, frame: Frame) {
    let kind = match frame.event.as_str() {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        _ => return,
    };
    let Some((table_name, meeting_id)) = frame.topic.split_once(':') else {
        return;
    };
    let Some(table) = Table::from_str(table_name) else {
        return;
    };

    let record = frame
        .payload
        .get("record")
        .cloned()
        .unwrap_or(Value::Null);
    let payload = match table {
        Table::Meetings => match serde_json::from_value::<Meeting>(record) {
            Ok(meeting) => ChangePayload::Meeting(meeting),
            Err(err) => {
                warn!("Dropping meeting event with bad record: {}", err);
                return;
            }
        },
        Table::Notes => match serde_json::from_value::<Note>(record) {
            Ok(note) => ChangePayload::Note(note),
            Err(err) => {
                warn!("Dropping note event with bad record: {}", err);
                return;
            }
        },
        // Question payloads are not trusted to describe the mutation;
        // consumers re-fetch the list, so only the scope is forwarded.
        Table::Questions => ChangePayload::Questions {
            meeting_id: meeting_id.to_string(),
        },
    };

    let event = ChangeEvent { kind, payload };
    let mut stale = Vec::new();
    let mut listeners = listeners.lock().unwrap();
    for (id, listener) in listeners.iter() {
        if listener.table != table
            || listener.meeting_id != meeting_id
            || !listener.filter.matches(event.kind)
        {
            continue;
        }
        match listener.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Subscriber lagging, dropping event for {}", frame.topic);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => stale.push(*id),
        }
    }
    for id in stale {
        listeners.remove(&id);
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(
        &self,
        table: Table,
        meeting_id: &str,
        filter: EventFilter,
    ) -> Result<Subscription, StoreError> {
        let topic = format!("{}:{}", table.as_str(), meeting_id);
        let join =
            serde_json::to_string(&Frame::control(&topic, "subscribe")).map_err(StoreError::Decode)?;
        self.outbound
            .send(Message::Text(join))
            .await
            .map_err(|_| StoreError::Feed("realtime connection closed".to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().unwrap().insert(
            id,
            Listener {
                table,
                meeting_id: meeting_id.to_string(),
                filter,
                tx,
            },
        );

        let listeners = self.listeners.clone();
        let outbound = self.outbound.clone();
        Ok(Subscription::new(rx, move || {
            listeners.lock().unwrap().remove(&id);
            if let Ok(leave) = serde_json::to_string(&Frame::control(&topic, "leave")) {
                let _ = outbound.try_send(Message::Text(leave));
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_routes_by_topic_and_filter() {
        let listeners = Mutex::new(HashMap::new());
        let (tx, mut rx) = mpsc::channel(4);
        listeners.lock().unwrap().insert(
            1,
            Listener {
                table: Table::Notes,
                meeting_id: "M1".to_string(),
                filter: EventFilter::Only(ChangeKind::Update),
                tx,
            },
        );

        let note = serde_json::json!({
            "id": "n1",
            "meetingId": "M1",
            "createdBy": "shared",
            "content": "hello"
        });

        // Insert is filtered out, update for another meeting is out of
        // scope, update for M1 goes through.
        dispatch(
            &listeners,
            Frame {
                topic: "meeting_notes:M1".to_string(),
                event: "INSERT".to_string(),
                payload: serde_json::json!({ "record": note }),
            },
        );
        dispatch(
            &listeners,
            Frame {
                topic: "meeting_notes:OTHER".to_string(),
                event: "UPDATE".to_string(),
                payload: serde_json::json!({ "record": note }),
            },
        );
        dispatch(
            &listeners,
            Frame {
                topic: "meeting_notes:M1".to_string(),
                event: "UPDATE".to_string(),
                payload: serde_json::json!({ "record": note }),
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_question_events_carry_scope_only() {
        let listeners = Mutex::new(HashMap::new());
        let (tx, mut rx) = mpsc::channel(4);
        listeners.lock().unwrap().insert(
            1,
            Listener {
                table: Table::Questions,
                meeting_id: "M1".to_string(),
                filter: EventFilter::All,
                tx,
            },
        );

        dispatch(
            &listeners,
            Frame {
                topic: "meeting_questions:M1".to_string(),
                event: "DELETE".to_string(),
                payload: Value::Null,
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        match event.payload {
            ChangePayload::Questions { meeting_id } => assert_eq!(meeting_id, "M1"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_drops_malformed_records() {
        let listeners = Mutex::new(HashMap::new());
        let (tx, mut rx) = mpsc::channel(4);
        listeners.lock().unwrap().insert(
            1,
            Listener {
                table: Table::Meetings,
                meeting_id: "M1".to_string(),
                filter: EventFilter::All,
                tx,
            },
        );

        dispatch(
            &listeners,
            Frame {
                topic: "meetings:M1".to_string(),
                event: "UPDATE".to_string(),
                payload: serde_json::json!({ "record": { "id": "M1" } }),
            },
        );
        assert!(rx.try_recv().is_err());
    }
}
