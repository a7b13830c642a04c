mod chat_e2e;
mod providers;
