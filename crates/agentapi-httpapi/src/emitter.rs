use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use agentapi_protocol::{AgentStatus, ConversationMessage};
use agentapi_screentracker::ConversationStatus;
use tokio::sync::mpsc;

use crate::events::{convert_status, trim_screen_for_wire, Event, ScreenUpdateBody, StatusChangeBody};

/// Fans tracker state changes out to SSE subscribers.
///
/// Each subscriber gets a bounded channel. Sends never block: a subscriber
/// whose buffer is full is closed and removed, which is the signal for its
/// consumer to terminate. Listeners must actively drain their channel.
pub struct EventEmitter {
    state: Mutex<EmitterState>,
}

struct EmitterState {
    messages: Vec<ConversationMessage>,
    status: AgentStatus,
    screen: String,
    subscribers: HashMap<usize, mpsc::Sender<Event>>,
    next_subscriber_id: usize,
    subscription_buf_size: usize,
}

impl EventEmitter {
    pub fn new(subscription_buf_size: usize) -> Self {
        assert!(
            subscription_buf_size > 0,
            "subscription buffer size must be positive"
        );
        Self {
            state: Mutex::new(EmitterState {
                messages: Vec::new(),
                status: AgentStatus::Running,
                screen: String::new(),
                subscribers: HashMap::new(),
                next_subscriber_id: 0,
                subscription_buf_size,
            }),
        }
    }

    /// Emit a `message_update` for every message that differs field-for-field
    /// from the previous snapshot. Only the tail may change and new messages
    /// are only appended, so updates leave in id order.
    pub fn update_messages_and_emit_changes(&self, new_messages: Vec<ConversationMessage>) {
        let mut state = self.lock_state();
        let max_len = state.messages.len().max(new_messages.len());
        for i in 0..max_len {
            let old = state.messages.get(i);
            let new = new_messages.get(i);
            if old != new {
                if let Some(message) = new {
                    notify_subscribers(&mut state, Event::MessageUpdate(message.clone()));
                }
            }
        }
        state.messages = new_messages;
    }

    pub fn update_status_and_emit_changes(&self, new_status: ConversationStatus) {
        let mut state = self.lock_state();
        let new_agent_status = convert_status(new_status);
        if state.status == new_agent_status {
            return;
        }
        notify_subscribers(
            &mut state,
            Event::StatusChange(StatusChangeBody {
                status: new_agent_status,
            }),
        );
        state.status = new_agent_status;
    }

    pub fn update_screen_and_emit_changes(&self, new_screen: String) {
        let mut state = self.lock_state();
        if state.screen == new_screen {
            return;
        }
        notify_subscribers(
            &mut state,
            Event::ScreenUpdate(ScreenUpdateBody {
                screen: trim_screen_for_wire(&new_screen),
            }),
        );
        state.screen = new_screen;
    }

    /// Register a subscriber. Returns its id, the event channel, and a
    /// synthetic event sequence reconstructing the current state: one
    /// `message_update` per message, then the status, then the screen.
    pub fn subscribe(&self) -> (usize, mpsc::Receiver<Event>, Vec<Event>) {
        let mut state = self.lock_state();
        let bootstrap = current_state_as_events(&state);

        let (sender, receiver) = mpsc::channel(state.subscription_buf_size);
        let id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        state.subscribers.insert(id, sender);
        (id, receiver, bootstrap)
    }

    /// Drop a subscriber, closing its channel.
    pub fn unsubscribe(&self, id: usize) {
        let mut state = self.lock_state();
        state.subscribers.remove(&id);
    }

    fn lock_state(&self) -> MutexGuard<'_, EmitterState> {
        self.state.lock().expect("event emitter lock poisoned")
    }
}

fn notify_subscribers(state: &mut EmitterState, event: Event) {
    let ids: Vec<usize> = state.subscribers.keys().copied().collect();
    for id in ids {
        let sender = &state.subscribers[&id];
        if sender.try_send(event.clone()).is_err() {
            // Full or disconnected either way: drop the subscriber. Closing
            // the channel tells the consumer to terminate.
            tracing::warn!(subscriber_id = id, "dropping slow event subscriber");
            state.subscribers.remove(&id);
        }
    }
}

fn current_state_as_events(state: &EmitterState) -> Vec<Event> {
    let mut events = Vec::with_capacity(state.messages.len() + 2);
    for message in &state.messages {
        events.push(Event::MessageUpdate(message.clone()));
    }
    events.push(Event::StatusChange(StatusChangeBody {
        status: state.status,
    }));
    events.push(Event::ScreenUpdate(ScreenUpdateBody {
        screen: trim_screen_for_wire(&state.screen),
    }));
    events
}
