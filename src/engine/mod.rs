pub mod courier_ops;
pub mod dispatch;
pub mod lifecycle;
pub mod pool;
pub mod pricing;

#[cfg(test)]
mod fixture;
