/// One queued operation against the notification connection. The
/// supervision loop drains these in enqueue order (§5: "the broker
/// processes commands in enqueue order on a single task").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Listen(String),
    Unlisten(String),
}
