mod helpers;
mod mocks;

mod api;
mod webhook;
