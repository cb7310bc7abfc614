// Copyright (C) 2022-2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of relp-appender.
//
// relp-appender is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// relp-appender is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with relp-appender.  If
// not, see <http://www.gnu.org/licenses/>.

//! [relp-appender](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! The [`Layer`] here is the bridge from [`tracing`] to a [`LogAppender`]: each [`Event`] is
//! rendered to a payload by an [`EventFormatter`] & handed to the appender.
//!
//! [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
//!
//! Events emitted by this crate itself are never forwarded; the appender's own diagnostics
//! would otherwise be fed straight back into it. Nor is any event raised on a thread that is
//! already inside [`append`] (by a library the appender calls into, say): it is dropped rather
//! than re-entering the appender.
//!
//! [`append`]: LogAppender::append

use crate::{
    appender::{self, LogAppender},
    config::AppenderConfig,
    error::Result,
};

use tracing::{field::Field, Event};
use tracing_subscriber::layer::Context;

use std::{cell::Cell, fmt::Write, sync::Arc};

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

thread_local! {
    static APPENDING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside [`LogAppender::append`] for as long as it lives.
struct AppendGuard;

impl AppendGuard {
    /// `None` if this thread is already appending.
    fn enter() -> Option<AppendGuard> {
        APPENDING.with(|appending| {
            if appending.replace(true) {
                None
            } else {
                Some(AppendGuard)
            }
        })
    }
}

impl Drop for AppendGuard {
    fn drop(&mut self) {
        APPENDING.with(|appending| appending.set(false));
    }
}

/// Render a [`tracing`] [`Event`] as a log payload.
///
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
///
/// Returning `None` means the event produces no log record.
pub trait EventFormatter {
    fn format(&self, event: &Event<'_>) -> Option<String>;
}

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
    fields: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_owned());
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // The tracing macros pre-format `message` as `fmt::Arguments`, whose `Debug`
            // rendering has no enclosing quotes.
            self.message = Some(format!("{:?}", value));
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// An [`EventFormatter`] producing the event's "message" field followed by its remaining fields
/// as ` key=value` pairs. Events without a message produce nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageFormatter;

impl EventFormatter for MessageFormatter {
    fn format(&self, event: &Event<'_>) -> Option<String> {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        visitor.message.map(|mut message| {
            message.push_str(&visitor.fields);
            message
        })
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] that delivers [`Event`]s through a
/// [`LogAppender`].
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/0.1.35/tracing/struct.Event.html
pub struct Layer<F: EventFormatter = MessageFormatter> {
    appender: Arc<dyn LogAppender>,
    formatter: F,
}

impl Layer<MessageFormatter> {
    pub fn new(appender: Arc<dyn LogAppender>) -> Layer<MessageFormatter> {
        Layer {
            appender,
            formatter: MessageFormatter,
        }
    }
    /// Build the appender described by `config` & wrap it in a [`Layer`].
    pub fn from_config(config: AppenderConfig) -> Result<Layer<MessageFormatter>> {
        Ok(Layer::new(Arc::from(appender::from_config(config)?)))
    }
}

impl<F: EventFormatter> Layer<F> {
    pub fn with_formatter(appender: Arc<dyn LogAppender>, formatter: F) -> Layer<F> {
        Layer {
            appender,
            formatter,
        }
    }
    /// The appender behind this layer; hang on to a clone of this to [`stop`] it at shutdown.
    ///
    /// [`stop`]: LogAppender::stop
    pub fn appender(&self) -> Arc<dyn LogAppender> {
        self.appender.clone()
    }
}

fn is_own_event(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with("::"))
}

impl<S, F> tracing_subscriber::layer::Layer<S> for Layer<F>
where
    S: tracing_core::Subscriber,
    F: EventFormatter + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_own_event(event.metadata().target()) {
            return;
        }
        if let Some(_guard) = AppendGuard::enter() {
            if let Some(payload) = self.formatter.format(event) {
                self.appender.append(&payload);
            }
        }
    }
}
