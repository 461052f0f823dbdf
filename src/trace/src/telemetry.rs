use opentelemetry::trace::TraceId;
use rand::Rng;

///  Generate a random opentelemetry::trace::TraceId to correlate the events of one operation
pub fn get_trace_id() -> TraceId {
    let mut rng = rand::thread_rng();
    let val: u128 = rng.gen();
    TraceId::from_bytes(val.to_be_bytes())
}
