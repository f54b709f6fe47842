//! Integration tests driving the full loader → cache → dispatch pipeline.

#[cfg(test)]
mod common;
#[cfg(test)]
mod live_router;
#[cfg(test)]
mod routing;
