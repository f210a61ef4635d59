// Copyright (c) The Up Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A named progress event with free-form fields.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    pub fields: Value,
}

/// Cloneable sink handed to every pipeline stage. Consumers must not
/// rely on ordering between unrelated event kinds.
#[derive(Clone)]
pub struct Events {
    sender: UnboundedSender<Event>,
}

impl Events {
    pub fn channel() -> (Self, UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emit an event. A detached receiver drops events silently.
    pub fn emit(&self, name: &str, fields: Value) {
        let _ = self.sender.send(Event { name: name.to_string(), fields });
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit("log", json!({ "message": message.into() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_arrive_in_order() {
        let (events, mut receiver) = Events::channel();

        events.log("packaging");
        events.emit("platform.build.zip", json!({ "files": 3 }));

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.name, "log");
        assert_eq!(first.fields["message"], "packaging");

        let second = receiver.recv().await.unwrap();
        assert_eq!(second.name, "platform.build.zip");
        assert_eq!(second.fields["files"], 3);
    }

    #[tokio::test]
    async fn a_dropped_receiver_does_not_panic() {
        let (events, receiver) = Events::channel();
        drop(receiver);
        events.log("ignored");
    }
}
