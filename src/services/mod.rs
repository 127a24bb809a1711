// Services layered over the process table: resource accounting and the
// top-level process service that ties everything together.
pub mod process_service;
pub mod resource_ledger;
