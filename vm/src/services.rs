const RABBITMQ: &str = "rabbitmq";
const REDIS: &str = "redis";
const SPRING_CLOUD_SERVICES: &str = "spring-cloud-services";

/// Expand a comma separated service selector into the services the guest
/// should run, comma joined, deduplicated in first-seen order. Unknown tokens
/// are dropped.
pub fn normalize_services(selector: &str) -> String {
    let mut services: Vec<&str> = Vec::new();
    let tokens: Vec<&str> = if selector.trim().is_empty() {
        vec!["default"]
    } else {
        selector.split(',').map(str::trim).collect()
    };

    for token in tokens {
        let expanded: &[&str] = match token {
            "all" => &[RABBITMQ, REDIS, SPRING_CLOUD_SERVICES],
            "default" => &[RABBITMQ, REDIS],
            "scs" | SPRING_CLOUD_SERVICES => &[RABBITMQ, SPRING_CLOUD_SERVICES],
            RABBITMQ => &[RABBITMQ],
            REDIS => &[REDIS],
            _ => &[],
        };
        for &service in expanded {
            if !services.contains(&service) {
                services.push(service);
            }
        }
    }

    services.join(",")
}
