use kaas_operator::crd::all_crds;

fn main() {
    for crd in all_crds() {
        let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
        println!("---\n{}", yaml.trim_end());
    }
}
