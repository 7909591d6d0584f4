#![no_main]
use libfuzzer_sys::fuzz_target;
use modhost::module::registry::{DependencyResolver, ModuleManifest};
use modhost::module::validation::DescriptorValidator;

fuzz_target!(|data: &[u8]| {
    // Arbitrary manifest text must parse or fail with an error, never panic
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(manifest) = ModuleManifest::parse(text) else {
        return;
    };

    // Whatever parsed must survive validation, resolution and re-rendering
    let validator = DescriptorValidator::new();
    let mut resolver = DependencyResolver::new();
    for descriptor in manifest.descriptors() {
        let _ = validator.validate(&descriptor);
        let _ = resolver.add_module(descriptor);
    }
    let result = resolver.resolve();
    assert!(result.is_success() || result.load_order.is_empty());

    if let Ok(rendered) = manifest.to_toml() {
        let reparsed = ModuleManifest::parse(&rendered).expect("rendered manifest must parse");
        assert_eq!(reparsed, manifest);
    }
});
