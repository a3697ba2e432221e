//! # Events Module
//!
//! Progress reporting for the organize pipeline.
//!
//! The pipeline never prints. It emits [`Event`]s through an
//! [`EventSender`]; the CLI drains them on a separate thread to drive
//! progress bars, and library callers can pass [`null_sender`] to ignore them.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Process(ProcessEvent::Progress(p)) = event {
//!             println!("Processed {}/{}", p.completed, p.total);
//!         }
//!     }
//! });
//!
//! pipeline.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
