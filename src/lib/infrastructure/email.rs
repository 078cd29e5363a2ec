//! Email delivery infrastructure

pub mod sendgrid;

mod xml;
