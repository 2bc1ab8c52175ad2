//! Core types for postaction.
//!
//! This module provides type-safe wrappers for posts, actions, dialogs and
//! the payloads exchanged with integrations and clients.

pub mod channel;
pub mod dialog;
pub mod event;
pub mod id;
pub mod integration;
pub mod post;

pub use channel::Channel;
pub use dialog::{Dialog, DialogElement, DialogOption, OpenDialogRequest};
pub use event::{
    Broadcast, EVENT_EPHEMERAL_MESSAGE, EVENT_OPEN_DIALOG, EVENT_POST_EDITED, WebSocketEvent,
};
pub use id::*;
pub use integration::{
    CONTEXT_SELECTED_OPTION, DoPostActionRequest, PostActionApiResponse,
    PostActionIntegrationRequest, PostActionIntegrationResponse,
};
pub use post::*;
