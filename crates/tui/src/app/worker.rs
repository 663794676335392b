use std::sync::{mpsc::Sender, Arc};

use providers::{stream_reply, ChatClient};
use tracing::{error, info};
use tutor_core::llm::{ChatError, ChatMessage};
use tutor_core::Session;

/// Progress of one streamed reply, tagged with the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Update { conversation: String, content: String },
    Done { conversation: String, content: String },
    Failed { conversation: String, error: ChatError },
}

impl WorkerEvent {
    pub fn conversation(&self) -> &str {
        match self {
            WorkerEvent::Update { conversation, .. }
            | WorkerEvent::Done { conversation, .. }
            | WorkerEvent::Failed { conversation, .. } => conversation,
        }
    }
}

pub struct StreamJob {
    pub client: Arc<ChatClient>,
    pub session: Session,
    pub conversation: String,
    pub messages: Vec<ChatMessage>,
    pub max_pending: usize,
}

/// Runs the request on its own thread and runtime so the UI loop never blocks.
pub fn spawn(job: StreamJob, tx: Sender<WorkerEvent>) {
    std::thread::spawn(move || {
        let StreamJob {
            client,
            session,
            conversation,
            messages,
            max_pending,
        } = job;
        let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                error!(target: "tui", "worker runtime: {}", e);
                let _ = tx.send(WorkerEvent::Failed {
                    conversation,
                    error: ChatError::Other(e.to_string()),
                });
                return;
            }
        };
        info!(target: "tui", "stream start conversation={} history={}", conversation, messages.len());
        let res = rt.block_on(async {
            stream_reply(client.as_ref(), &session, &messages, max_pending, |so_far| {
                let _ = tx.send(WorkerEvent::Update {
                    conversation: conversation.clone(),
                    content: so_far.to_string(),
                });
            })
            .await
        });
        let ev = match res {
            Ok(content) => WorkerEvent::Done {
                conversation,
                content,
            },
            Err(error) => WorkerEvent::Failed {
                conversation,
                error,
            },
        };
        let _ = tx.send(ev);
    });
}
