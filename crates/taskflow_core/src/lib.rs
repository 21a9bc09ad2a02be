pub mod domain;
pub mod normalize;
pub mod ports;
pub mod reconcile;
pub mod resource;
pub mod views;

pub use domain::{
    AccessToken, AuthError, EstablishedSession, Priority, Project, ProjectDraft, ProjectFields,
    RecordId, Task, TaskDraft, TaskFields, Todo, TodoDraft, TodoFields, User, ValidationError,
};
pub use ports::{Body, HttpRequest, HttpResponse, Method, PortError, PortResult, Transport};
pub use resource::{Completable, Nested, Resource};
