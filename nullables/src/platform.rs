//! Nullable chat platform — records calls instead of sending them.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use warden_platform::{
    ChatPlatform, CommandSpec, InteractionRef, InteractionResponse, Member, MessageRef,
    OutgoingMessage, PlatformError,
};
use warden_types::{ChannelId, RoleId, ScopeId, SubjectId};

/// Which capability a call exercised; used to inject failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    DeleteMessage,
    RestrictMember,
    SendMessage,
    FetchMember,
    AddRole,
    RemoveRole,
    CreateThread,
    AddThreadMember,
    ArchiveThread,
    DeleteChannel,
    Respond,
    RegisterCommands,
}

/// One recorded call, with its arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum PlatformCall {
    DeleteMessage(MessageRef),
    RestrictMember {
        scope: ScopeId,
        subject: SubjectId,
        duration: Duration,
        reason: String,
    },
    SendMessage {
        channel: ChannelId,
        message: OutgoingMessage,
    },
    FetchMember {
        scope: ScopeId,
        subject: SubjectId,
    },
    AddRole {
        scope: ScopeId,
        subject: SubjectId,
        role: RoleId,
    },
    RemoveRole {
        scope: ScopeId,
        subject: SubjectId,
        role: RoleId,
    },
    CreateThread {
        parent: ChannelId,
        name: String,
    },
    AddThreadMember {
        thread: ChannelId,
        subject: SubjectId,
    },
    ArchiveThread(ChannelId),
    DeleteChannel(ChannelId),
    Respond {
        interaction: InteractionRef,
        response: InteractionResponse,
    },
    RegisterCommands(Vec<CommandSpec>),
}

impl PlatformCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::DeleteMessage(_) => Operation::DeleteMessage,
            Self::RestrictMember { .. } => Operation::RestrictMember,
            Self::SendMessage { .. } => Operation::SendMessage,
            Self::FetchMember { .. } => Operation::FetchMember,
            Self::AddRole { .. } => Operation::AddRole,
            Self::RemoveRole { .. } => Operation::RemoveRole,
            Self::CreateThread { .. } => Operation::CreateThread,
            Self::AddThreadMember { .. } => Operation::AddThreadMember,
            Self::ArchiveThread(_) => Operation::ArchiveThread,
            Self::DeleteChannel(_) => Operation::DeleteChannel,
            Self::Respond { .. } => Operation::Respond,
            Self::RegisterCommands(_) => Operation::RegisterCommands,
        }
    }
}

/// A test platform that records every call and fails on demand.
///
/// Calls are recorded even when they are made to fail.
#[derive(Default)]
pub struct NullPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failing: Mutex<HashSet<Operation>>,
    next_thread: Mutex<u64>,
    latency: Mutex<Duration>,
}

impl NullPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` return an error.
    pub fn fail(&self, op: Operation) {
        self.failing.lock().unwrap().insert(op);
    }

    /// Stop failing `op`.
    pub fn heal(&self, op: Operation) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls of one kind.
    pub fn calls_of(&self, op: Operation) -> Vec<PlatformCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation() == op)
            .collect()
    }

    pub fn count(&self, op: Operation) -> usize {
        self.calls_of(op).len()
    }

    /// Delay every subsequent call by `latency` before it is recorded.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn settle(&self) {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Forget all recorded calls (failure settings are kept).
    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: PlatformCall) -> Result<(), PlatformError> {
        let op = call.operation();
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(PlatformError::Http {
                status: 500,
                body: format!("injected failure for {op:?}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for NullPlatform {
    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::DeleteMessage(message.clone()))
    }

    async fn restrict_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        duration: Duration,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::RestrictMember {
            scope: scope.clone(),
            subject: subject.clone(),
            duration,
            reason: reason.to_string(),
        })
    }

    async fn send_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::SendMessage {
            channel: channel.clone(),
            message: message.clone(),
        })
    }

    async fn fetch_member(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
    ) -> Result<Member, PlatformError> {
        self.settle().await;
        self.record(PlatformCall::FetchMember {
            scope: scope.clone(),
            subject: subject.clone(),
        })?;
        Ok(Member {
            subject: subject.clone(),
            scope: scope.clone(),
            roles: Vec::new(),
        })
    }

    async fn add_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::AddRole {
            scope: scope.clone(),
            subject: subject.clone(),
            role: role.clone(),
        })
    }

    async fn remove_role(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        role: &RoleId,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::RemoveRole {
            scope: scope.clone(),
            subject: subject.clone(),
            role: role.clone(),
        })
    }

    async fn create_private_thread(
        &self,
        parent: &ChannelId,
        name: &str,
        _auto_archive_minutes: u32,
        _reason: &str,
    ) -> Result<ChannelId, PlatformError> {
        self.settle().await;
        self.record(PlatformCall::CreateThread {
            parent: parent.clone(),
            name: name.to_string(),
        })?;
        let mut next = self.next_thread.lock().unwrap();
        *next += 1;
        Ok(ChannelId::new(format!("thread-{}", *next)))
    }

    async fn add_thread_member(
        &self,
        thread: &ChannelId,
        subject: &SubjectId,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::AddThreadMember {
            thread: thread.clone(),
            subject: subject.clone(),
        })
    }

    async fn archive_thread(&self, thread: &ChannelId) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::ArchiveThread(thread.clone()))
    }

    async fn delete_channel(&self, channel: &ChannelId) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::DeleteChannel(channel.clone()))
    }

    async fn respond(
        &self,
        interaction: &InteractionRef,
        response: &InteractionResponse,
    ) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::Respond {
            interaction: interaction.clone(),
            response: response.clone(),
        })
    }

    async fn register_commands(&self, commands: &[CommandSpec]) -> Result<(), PlatformError> {
        self.settle().await;
        self.record(PlatformCall::RegisterCommands(commands.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::MessageId;

    fn msg() -> MessageRef {
        MessageRef {
            channel: ChannelId::new("c"),
            message: MessageId::new("m"),
        }
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let platform = NullPlatform::new();
        platform.delete_message(&msg()).await.unwrap();
        platform
            .send_message(&ChannelId::new("c"), &OutgoingMessage::text("hi"))
            .await
            .unwrap();
        let ops: Vec<_> = platform.calls().iter().map(|c| c.operation()).collect();
        assert_eq!(ops, vec![Operation::DeleteMessage, Operation::SendMessage]);
    }

    #[tokio::test]
    async fn injected_failures_still_record() {
        let platform = NullPlatform::new();
        platform.fail(Operation::DeleteMessage);
        assert!(platform.delete_message(&msg()).await.is_err());
        assert_eq!(platform.count(Operation::DeleteMessage), 1);

        platform.heal(Operation::DeleteMessage);
        assert!(platform.delete_message(&msg()).await.is_ok());
    }

    #[tokio::test]
    async fn threads_get_fresh_ids() {
        let platform = NullPlatform::new();
        let parent = ChannelId::new("p");
        let a = platform.create_private_thread(&parent, "a", 60, "r").await.unwrap();
        let b = platform.create_private_thread(&parent, "b", 60, "r").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn latency_delays_recording() {
        let platform = std::sync::Arc::new(NullPlatform::new());
        platform.set_latency(Duration::from_millis(50));
        let call = {
            let platform = platform.clone();
            tokio::spawn(async move { platform.delete_message(&msg()).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(platform.count(Operation::DeleteMessage), 0);
        call.await.unwrap().unwrap();
        assert_eq!(platform.count(Operation::DeleteMessage), 1);
    }
}
