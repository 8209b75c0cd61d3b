use std::fmt;

/// Where a cell is in its lifecycle. Reading it never forces the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    InProgress,
    Done,
    Failed,
    Poisoned,
}

impl Status {
    pub fn is_settled(self) -> bool {
        matches!(self, Status::Done | Status::Failed | Status::Poisoned)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::InProgress => "in progress",
            Status::Done => "done",
            Status::Failed => "failed",
            Status::Poisoned => "poisoned",
        };
        f.write_str(s)
    }
}
