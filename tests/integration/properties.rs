use std::collections::HashSet;

use folderseed::plan::TreePlanner;
use folderseed::replication::ReplicationExecutor;
use folderseed::tree::NodeKind;
use proptest::prelude::*;

use crate::integration::support::{
    body, fast_options, gateway_for_shape, read, runtime, shape_strategy, DESTINATION_ID,
    TEMPLATE_ID,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plan_is_deterministic_and_topological(shape in shape_strategy(40)) {
        let gateway = gateway_for_shape(&shape);
        let tree = runtime().block_on(read(&gateway, TEMPLATE_ID));

        let first = TreePlanner::plan(&tree, "Client");
        let second = TreePlanner::plan(&tree, "Client");
        prop_assert_eq!(&first, &second);
        prop_assert!(first.validate().is_ok());

        prop_assert_eq!(first.len(), tree.len());
        prop_assert_eq!(first.folder_steps(), tree.folder_count());
        prop_assert_eq!(first.file_steps(), tree.file_count());

        let root = first.root().unwrap();
        prop_assert_eq!(root.name.as_str(), "Client");
        prop_assert_eq!(root.kind, NodeKind::Folder);

        let mut seen = HashSet::new();
        for step in first.steps() {
            if let Some(parent) = &step.source_parent_id {
                prop_assert!(seen.contains(parent.as_str()));
            }
            prop_assert!(seen.insert(step.source_id.as_str()));
        }
    }

    #[test]
    fn full_success_reproduces_the_template(shape in shape_strategy(30)) {
        let gateway = gateway_for_shape(&shape);
        let rt = runtime();
        let tree = rt.block_on(read(&gateway, TEMPLATE_ID));
        let plan = TreePlanner::plan(&tree, "Client");

        let result = rt
            .block_on(async {
                ReplicationExecutor::new(gateway.clone(), fast_options(1))
                    .execute(&plan, DESTINATION_ID)
                    .await
            })
            .unwrap();

        prop_assert!(result.is_clean());
        prop_assert_eq!(result.created_folders, tree.folder_count());
        prop_assert_eq!(result.copied_files, tree.file_count());
        prop_assert_eq!(
            body(gateway.outline(&result.root_destination_id)),
            body(gateway.outline(TEMPLATE_ID))
        );
    }
}
