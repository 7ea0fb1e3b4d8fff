/*
Engine and local host for the task widget.

The engine owns task CRUD, filtering and sorting, expiry, and reminder
scheduling. The binary serves it to the widget page over a loopback API.
*/

pub mod app;
pub mod board;
pub mod clock;
pub mod config;
pub mod error;
pub mod logic;
pub mod models;
pub mod notify;
pub mod routes_board;
pub mod routes_tasks;
pub mod store;
pub mod tasks;

pub use app::{AppState, Engine};
pub use clock::{Clock, FixedClock, SystemClock, TimeService};
pub use error::{StoreError, ValidationError};
pub use models::{Priority, StatusFilter, Task, TaskInput, TaskStatus};
pub use store::{JsonFileBackend, MemoryBackend, TaskBackend};
pub use tasks::TaskStore;
