#![no_main]
use libfuzzer_sys::fuzz_target;
use modhost::module::{DependencyResolver, ModuleDescriptor, Priority};
use std::collections::HashMap;

const PRIORITIES: [Priority; 5] = [
    Priority::Lowest,
    Priority::Low,
    Priority::Normal,
    Priority::High,
    Priority::Highest,
];

fuzz_target!(|data: &[u8]| {
    // Byte pairs are (module, dependency) edges over at most 32 modules;
    // arbitrary graphs include cycles, self loops and missing modules
    if data.is_empty() {
        return;
    }

    let count = (data[0] % 32) as usize + 1;
    let mut descriptors: Vec<ModuleDescriptor> = (0..count)
        .map(|i| {
            ModuleDescriptor::new(format!("m{}", i)).with_priority(PRIORITIES[i % PRIORITIES.len()])
        })
        .collect();

    for pair in data[1..].chunks_exact(2) {
        let from = pair[0] as usize % count;
        // Indices past `count` refer to modules that do not exist
        let to = pair[1] as usize % (count + 2);
        descriptors[from].hard_dependencies.insert(format!("m{}", to));
    }

    let mut resolver = DependencyResolver::new();
    for descriptor in &descriptors {
        resolver.add_module(descriptor.clone()).expect("names are unique");
    }
    let result = resolver.resolve();

    if !result.is_success() {
        assert!(result.load_order.is_empty());
        if let Some(cycle) = &result.cycle {
            assert_eq!(cycle.first(), cycle.last());
        }
        return;
    }

    // Every dependency precedes its dependent
    let position: HashMap<&str, usize> = result
        .load_order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    assert_eq!(position.len(), count);
    for descriptor in &descriptors {
        for dep in &descriptor.hard_dependencies {
            assert!(position[dep.as_str()] < position[descriptor.name.as_str()]);
        }
    }
});
