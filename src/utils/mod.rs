mod periodic;

pub use periodic::PeriodicTask;
