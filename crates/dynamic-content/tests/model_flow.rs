//! Integration tests for the dynamic content model wired to the in-memory
//! store, plus custom collaborators plugged in through `ModelParts`.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use campaign_core::{
        AnonymousUser, CampaignError, CampaignResult, CurrentUser, EventBus, Lead, Page,
        StoreConfig,
    };
    use campaign_dynamic_content::events::{PRE_DELETE, PRE_SAVE};
    use campaign_dynamic_content::{
        default_messages, DeliverySource, DynamicContent, DynamicContentEvent,
        DynamicContentModel, FormFactory, FormOptions, InMemoryStore, ModelEntity, ModelParts,
        Stat, StatRepository,
    };
    use campaign_reporting::{ChartFilter, TimeUnit};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn model_for(
        store: Arc<InMemoryStore>,
        user: Uuid,
    ) -> (DynamicContentModel, Arc<EventBus<DynamicContentEvent>>) {
        let bus: Arc<EventBus<DynamicContentEvent>> = Arc::new(EventBus::new());
        let model = DynamicContentModel::in_memory(
            store,
            bus.clone(),
            Arc::new(default_messages()),
            Arc::new(CurrentUser::new(user)),
        );
        (model, bus)
    }

    struct FailingStats;

    impl StatRepository for FailingStats {
        fn save_entity(&self, _stat: Stat) -> CampaignResult<Stat> {
            Err(CampaignError::Store("connection reset".into()))
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        calls: Mutex<Vec<(String, Uuid, FormOptions)>>,
    }

    impl FormFactory for RecordingFactory {
        type Form = usize;

        fn create(
            &self,
            form_type: &str,
            entity: &DynamicContent,
            options: FormOptions,
        ) -> CampaignResult<usize> {
            let mut calls = self.calls.lock().unwrap();
            calls.push((form_type.to_string(), entity.id, options));
            Ok(calls.len())
        }
    }

    #[test]
    fn test_variant_family_through_store() {
        let store = Arc::new(InMemoryStore::new(StoreConfig::with_prefix("mtc_")));
        let (model, _) = model_for(store, Uuid::new_v4());

        let root = model.save_entity(DynamicContent::new("Hero", "<h1>Welcome</h1>")).unwrap();
        let b = model
            .save_entity(DynamicContent::variant_of(&root, "Hero B", "<h1>Hello</h1>"))
            .unwrap();
        let c = model
            .save_entity(DynamicContent::variant_of(&root, "Hero C", "<h1>Hi</h1>"))
            .unwrap();

        let loaded_variant = model.get_entity(c.id).unwrap().unwrap();
        let (parent, children) = model.get_variants(&loaded_variant);
        assert_eq!(parent.id, root.id);
        let mut ids: Vec<Uuid> = children.iter().map(|v| v.id).collect();
        ids.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(ids, expected);

        let loaded_root = model.get_entity(root.id).unwrap().unwrap();
        let (parent, children) = model.get_variants(&loaded_root);
        assert_eq!(parent.id, root.id);
        assert_eq!(children.len(), 2);

        let lonely = model.save_entity(DynamicContent::new("Footer", "<p>bye</p>")).unwrap();
        let loaded = model.get_entity(lonely.id).unwrap().unwrap();
        let (parent, children) = model.get_variants(&loaded);
        assert_eq!(parent.id, lonely.id);
        assert!(children.is_empty());
    }

    #[test]
    fn test_form_factory_receives_fixed_type_and_action() {
        let store = Arc::new(InMemoryStore::default());
        let (model, _) = model_for(store, Uuid::new_v4());
        let factory = RecordingFactory::default();
        let item = DynamicContent::new("A", "a");

        let mut options = FormOptions::new();
        options.insert("csrf_protection".into(), serde_json::json!(false));
        let n = model
            .create_form(&ModelEntity::from(item.clone()), &factory, Some("/s/dwc/new"), options)
            .unwrap();
        assert_eq!(n, 1);

        let calls = factory.calls.lock().unwrap();
        let (form_type, entity_id, options) = &calls[0];
        assert_eq!(form_type, "dwc");
        assert_eq!(*entity_id, item.id);
        assert_eq!(options["action"], "/s/dwc/new");
        assert_eq!(options["csrf_protection"], false);
    }

    #[test]
    fn test_form_rejects_before_reaching_factory() {
        let store = Arc::new(InMemoryStore::default());
        let (model, _) = model_for(store, Uuid::new_v4());
        let factory = RecordingFactory::default();

        let lead = ModelEntity::from(Lead::new(Uuid::new_v4()));
        let err = model
            .create_form(&lead, &factory, None, FormOptions::new())
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidArgument(_)));
        assert!(factory.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_store_failure_propagates_from_stat_entry() {
        let store = Arc::new(InMemoryStore::default());
        let model = DynamicContentModel::new(ModelParts {
            repository: store.clone(),
            stats: Arc::new(FailingStats),
            assignments: store.clone(),
            time_data: store,
            dispatcher: Arc::new(EventBus::<DynamicContentEvent>::new()),
            translator: Arc::new(default_messages()),
            user: Arc::new(AnonymousUser),
        });

        let lead = Lead::new(Uuid::new_v4());
        let err = model
            .create_stat_entry(&DynamicContent::new("A", "a"), &lead, Some("email"))
            .unwrap_err();
        assert!(matches!(err, CampaignError::Store(ref m) if m == "connection reset"));
    }

    #[test]
    fn test_listener_error_aborts_delete_before_write() {
        let store = Arc::new(InMemoryStore::default());
        let (model, bus) = model_for(store, Uuid::new_v4());
        let item = model.save_entity(DynamicContent::new("A", "a")).unwrap();

        let later = Arc::new(Mutex::new(false));
        bus.add_listener(PRE_DELETE, |_: &mut DynamicContentEvent| {
            Err(anyhow::anyhow!("content is in use by a campaign"))
        });
        let flag = later.clone();
        bus.add_listener(PRE_DELETE, move |_: &mut DynamicContentEvent| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let err = model.delete_entity(&item).unwrap_err();
        assert!(err.to_string().contains("content is in use"));
        assert!(!*later.lock().unwrap());
        assert!(model.get_entity(item.id).unwrap().is_some());
    }

    #[test]
    fn test_pre_save_event_carries_store_handle() {
        let store = Arc::new(InMemoryStore::default());
        let (model, bus) = model_for(store, Uuid::new_v4());
        let existing = model.save_entity(DynamicContent::new("Existing", "x")).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let out = seen.clone();
        let existing_id = existing.id;
        bus.add_listener(PRE_SAVE, move |event: &mut DynamicContentEvent| {
            let store = event.store().expect("store handle");
            *out.lock().unwrap() = Some(store.get_entity(existing_id)?.is_some());
            Ok(())
        });

        model.save_entity(DynamicContent::new("New", "n")).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    #[test]
    fn test_concurrent_slot_writes_are_all_kept() {
        let store = Arc::new(InMemoryStore::default());
        let (model, _) = model_for(store.clone(), Uuid::new_v4());
        let model = Arc::new(model);
        let item = model.save_entity(DynamicContent::new("A", "a")).unwrap();
        let lead = Lead::new(Uuid::new_v4());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let model = Arc::clone(&model);
                let item = item.clone();
                let lead = lead.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        model.set_slot_content_for_lead(&item, &lead, "hero").unwrap();
                        model.create_stat_entry(&item, &lead, Some("web")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let rows = store.assignments();
        assert_eq!(rows.len(), 200);
        let mut ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 200);
        assert_eq!(store.stats().len(), 200);
        assert_eq!(model.get_slot_content_for_lead("hero", &lead).unwrap().unwrap().id, item.id);
    }

    #[test]
    fn test_hits_chart_counts_only_own_pages_for_restricted_user() {
        let me = Uuid::new_v4();
        let store = Arc::new(InMemoryStore::default());
        let (model, _) = model_for(store.clone(), me);

        let mine = Page {
            id: Uuid::new_v4(),
            title: "Spring sale".into(),
            created_by: Some(me),
        };
        let theirs = Page {
            id: Uuid::new_v4(),
            title: "Other team".into(),
            created_by: Some(Uuid::new_v4()),
        };
        store.save_page(mine.clone());
        store.save_page(theirs.clone());

        let item = model.save_entity(DynamicContent::new("Banner", "<b>20% off</b>")).unwrap();
        let leads: Vec<Lead> = (0..3).map(|_| Lead::new(Uuid::new_v4())).collect();
        for lead in &leads {
            for container in [mine.id, theirs.id] {
                let delivery = DeliverySource {
                    container_id: Some(container),
                    ..Default::default()
                };
                model.create_stat_entry_with(&item, lead, delivery).unwrap();
            }
        }

        let to = Utc::now() + Duration::minutes(1);
        let from = to - Duration::days(6);
        let fmt = Some("%Y-%m-%d");
        let mut filter = ChartFilter::new();
        filter.insert("flag".into(), "total_and_unique".into());

        let chart = model
            .get_hits_line_chart_data(TimeUnit::Day, from, to, fmt, filter.clone(), false)
            .unwrap();
        assert_eq!(chart.datasets.len(), 2);
        assert_eq!(chart.labels.len(), chart.datasets[0].data.len());
        assert_eq!(chart.dataset("Total views").unwrap().data.iter().sum::<u64>(), 3);

        let chart = model
            .get_hits_line_chart_data(TimeUnit::Day, from, to, fmt, filter, true)
            .unwrap();
        assert_eq!(chart.dataset("Total views").unwrap().data.iter().sum::<u64>(), 6);
        assert_eq!(chart.labels.last().unwrap(), &to.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_anonymous_restricted_chart_is_empty() {
        let store = Arc::new(InMemoryStore::default());
        let page = Page { id: Uuid::new_v4(), title: "Landing".into(), created_by: None };
        store.save_page(page.clone());
        let model = DynamicContentModel::in_memory(
            store,
            Arc::new(EventBus::<DynamicContentEvent>::new()),
            Arc::new(default_messages()),
            Arc::new(AnonymousUser),
        );

        let item = DynamicContent::new("A", "a");
        model
            .create_stat_entry_with(
                &item,
                &Lead::new(Uuid::new_v4()),
                DeliverySource { container_id: Some(page.id), ..Default::default() },
            )
            .unwrap();

        let now = Utc::now();
        let (from, to) = (now - Duration::hours(2), now + Duration::hours(1));
        let chart = model
            .get_hits_line_chart_data(TimeUnit::Hour, from, to, None, ChartFilter::new(), false)
            .unwrap();
        assert_eq!(chart.datasets[0].data.iter().sum::<u64>(), 0);
    }
}
