mod common;
mod standing;
