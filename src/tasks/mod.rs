pub mod delivery_task;
