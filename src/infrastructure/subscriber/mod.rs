//! Subscriber infrastructure - Entity store client and import loader

mod import;
mod service;

pub use import::{load_subscribers, parse_subscribers};
pub use service::{
    ImportReport, SubscriberService, UpdateSubscriberRequest, DEFAULT_PAGE_SIZE,
    MAX_QUERY_RESULTS,
};
