mod endpoint_probe;
mod load_balance;
mod pipeline;
