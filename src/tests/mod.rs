mod content;
mod fitting;
mod json;
mod resolve;
mod transform;
