mod delivery;

pub use delivery::{
    AckOutcome, AttemptError, AttemptEvent, AttemptState, AttemptStats, DeliveryAttempt,
    ErrorKind, Payload, PayloadValue, Transition,
};
