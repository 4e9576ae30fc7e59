pub mod proxy_manager;
pub mod session;

pub use proxy_manager::{ProxyManager, ProxyServer};
pub use session::{BrowserSession, ChromeSession, ChromeSessionFactory, LaunchParams, SessionFactory};
