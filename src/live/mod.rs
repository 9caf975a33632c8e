pub mod events;
pub mod stomp;
pub mod subscriber;

pub use events::{match_topics, LiveEvent};
pub use subscriber::{ConnectionStatus, SubscriberConfig, Subscription, TopicHandler};
