use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("tutor_chat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("tutor_chat.client.request_errors");
pub(crate) static CLIENT_UPSTREAM_ERRORS: Counter =
    Counter::new("tutor_chat.client.upstream_errors");
pub(crate) static CLIENT_MISSING_CREDENTIAL: Counter =
    Counter::new("tutor_chat.client.missing_credential");

pub(crate) static STREAM_BYTES: Counter = Counter::new("tutor_chat.stream.bytes");
pub(crate) static STREAM_FRAGMENTS: Counter = Counter::new("tutor_chat.stream.fragments");
pub(crate) static STREAM_MALFORMED_LINES: Counter =
    Counter::new("tutor_chat.stream.malformed_lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("tutor_chat.stream.errors");
pub(crate) static STREAM_TTFB: Moments = Moments::new("tutor_chat.stream.ttfb_seconds");

pub(crate) static SESSION_TURNS_COMPLETED: Counter =
    Counter::new("tutor_chat.session.turns_completed");
pub(crate) static SESSION_TURNS_FAILED: Counter = Counter::new("tutor_chat.session.turns_failed");
pub(crate) static SESSION_TURNS_REJECTED: Counter =
    Counter::new("tutor_chat.session.turns_rejected");
pub(crate) static SESSION_CLEARS: Counter = Counter::new("tutor_chat.session.clears");
pub(crate) static SESSION_TURN_DURATION: Moments =
    Moments::new("tutor_chat.session.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_UPSTREAM_ERRORS);
    collector.register_counter(&CLIENT_MISSING_CREDENTIAL);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAGMENTS);
    collector.register_counter(&STREAM_MALFORMED_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFB);

    collector.register_counter(&SESSION_TURNS_COMPLETED);
    collector.register_counter(&SESSION_TURNS_FAILED);
    collector.register_counter(&SESSION_TURNS_REJECTED);
    collector.register_counter(&SESSION_CLEARS);
    collector.register_moments(&SESSION_TURN_DURATION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_with_collector() {
        register_biometrics(Collector::new());
    }
}
