use hostkit::prelude::*;

pub trait UserLogic: Send + Sync {
    fn get_user_name(&self) -> String;
}

/// One instance per request; remembers which request created it
pub struct RequestUserLogic {
    request_id: String,
}

impl RequestUserLogic {
    pub fn register(services: &mut ServiceCollection) {
        let counter = std::sync::Mutex::new(0u64);
        services.add_scoped(move |_| {
            let mut next = counter.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            let logic = RequestUserLogic {
                request_id: format!("visitor-{}", *next),
            };
            Ok(Arc::new(logic) as Arc<dyn UserLogic>)
        });
    }
}

impl UserLogic for RequestUserLogic {
    fn get_user_name(&self) -> String {
        self.request_id.clone()
    }
}
