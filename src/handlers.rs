pub mod feedback;
pub mod public_feedback;
pub mod rbac;
pub mod visits;
