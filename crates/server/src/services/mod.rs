pub mod signal_notifier;
