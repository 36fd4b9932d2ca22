// Question paper generator: the question bank, paper blueprints, random
// question selection and the HTTP surface that ties them to layout/render.

pub mod bank;
pub mod blueprint;
pub mod handlers;
pub mod selector;
