/// Coarse failure classification used when translating errors for callers.
///
/// The gateway itself never acts on the class (it does not retry); the
/// controller layer maps each class to one externally visible status.
///
/// | Class | Typical cause |
/// |-------|---------------|
/// | `RateLimited` | Upstream quota exhausted (HTTP 429 or quota payload) |
/// | `Connectivity` | Non-2xx status, connection failure, or timeout |
/// | `Auth` | Token endpoint or upstream rejected credentials |
/// | `NotFound` | Well-formed but empty upstream response |
/// | `Internal` | Malformed payload, bad configuration |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureClass {
    RateLimited,
    Connectivity,
    Auth,
    NotFound,
    Internal,
}
