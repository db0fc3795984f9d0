mod del;
mod info;
mod ping;
mod psync;
